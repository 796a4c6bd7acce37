use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Value carried by a runtime variable.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Data(serde_json::Value),
    Mutable(MutableRef),
    Intrinsic(Intrinsic),
}

/// Capabilities the runtime provides as builtin names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    Generators,
    Mutable,
}

impl Intrinsic {
    pub fn name(self) -> &'static str {
        match self {
            Self::Generators => "Generators",
            Self::Mutable => "Mutable",
        }
    }
}

impl Value {
    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_mutable(&self) -> Option<&MutableRef> {
        match self {
            Self::Mutable(mutable) => Some(mutable),
            _ => None,
        }
    }

    /// Change counter of a mutable, zero for everything else.
    pub fn version(&self) -> u64 {
        self.as_mutable().map_or(0, MutableRef::version)
    }

    /// Plain JSON rendering; mutables show their current value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined => serde_json::Value::Null,
            Self::Data(data) => data.clone(),
            Self::Mutable(mutable) => mutable.get().to_json(),
            Self::Intrinsic(intrinsic) => serde_json::Value::String(format!("[{}]", intrinsic.name())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::Mutable(a), Self::Mutable(b)) => a.ptr_eq(b),
            (Self::Intrinsic(a), Self::Intrinsic(b)) => a == b,
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(data: serde_json::Value) -> Self {
        Self::Data(data)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Data(text.into())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Data(text.into())
    }
}

/// Shared, assignable cell created by the `Mutable` intrinsic.
#[derive(Clone)]
pub struct MutableRef(Rc<MutableState>);

struct MutableState {
    value: RefCell<Value>,
    version: Cell<u64>,
}

impl MutableRef {
    pub fn new(initial: Value) -> Self {
        Self(Rc::new(MutableState {
            value: RefCell::new(initial),
            version: Cell::new(0),
        }))
    }

    pub fn get(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Stores `value`; returns whether it differed from the current one.
    pub fn set(&self, value: Value) -> bool {
        if *self.0.value.borrow() == value {
            return false;
        }
        *self.0.value.borrow_mut() = value;
        self.0.version.set(self.0.version.get() + 1);
        true
    }

    pub fn version(&self) -> u64 {
        self.0.version.get()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MutableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableRef")
            .field("value", &self.0.value.borrow())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mutable_version_moves_only_on_change() {
        let mutable = MutableRef::new(Value::from("aa"));
        assert!(!mutable.set(Value::from("aa")));
        assert_eq!(mutable.version(), 0);
        assert!(mutable.set(Value::from("bb")));
        assert_eq!(mutable.version(), 1);
        assert_eq!(Value::Mutable(mutable).to_json(), json!("bb"));
    }

    #[test]
    fn mutables_compare_by_identity() {
        let a = MutableRef::new(Value::Undefined);
        let b = MutableRef::new(Value::Undefined);
        assert_eq!(Value::Mutable(a.clone()), Value::Mutable(a));
        assert_ne!(Value::Mutable(b.clone()), Value::Mutable(MutableRef::new(Value::Undefined)));
        assert_ne!(Value::Undefined, Value::Data(json!(null)));
    }
}
