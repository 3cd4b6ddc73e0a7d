use std::fmt;

/// Identifies one measured method across calls.
///
/// Rendered as `Owner#selector` for methods taking a receiver and
/// `Owner.selector` for associated functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodIdentity {
    pub owner: &'static str,
    pub selector: &'static str,
    pub is_static: bool,
}

impl MethodIdentity {
    pub const fn instance(owner: &'static str, selector: &'static str) -> Self {
        Self {
            owner,
            selector,
            is_static: false,
        }
    }

    pub const fn associated(owner: &'static str, selector: &'static str) -> Self {
        Self {
            owner,
            selector,
            is_static: true,
        }
    }

    pub const fn separator(&self) -> char {
        if self.is_static { '.' } else { '#' }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, self.separator(), self.selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_use_kind_separator() {
        assert_eq!(MethodIdentity::instance("Cache", "get").label(), "Cache#get");
        assert_eq!(MethodIdentity::associated("Cache", "new").label(), "Cache.new");
    }

    #[test]
    fn test_equality_covers_all_fields() {
        let instance = MethodIdentity::instance("Cache", "get");
        assert_eq!(instance, MethodIdentity::instance("Cache", "get"));
        assert_ne!(instance, MethodIdentity::associated("Cache", "get"));
        assert_ne!(instance, MethodIdentity::instance("Store", "get"));
        assert_ne!(instance, MethodIdentity::instance("Cache", "put"));
    }
}
