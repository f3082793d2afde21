//! Plain helper type exposed to tooling through type descriptions

/// Static helpers hosts can call directly; not an entity script
pub struct Test;

impl Test {
    pub const TYPE_NAME: &'static str = "TestScript.Core.Test";

    pub fn test_method() -> i32 {
        42
    }

    pub fn add(a: i32, b: i32) -> i32 {
        a + b
    }

    pub fn greet(name: &str) -> String {
        format!("Hello, {}! Welcome to Void.", name)
    }

    pub fn log_message(message: &str) -> String {
        format!("[Script Log] {}", message)
    }
}

pub(crate) fn register(catalog: &mut void_bridge::TypeCatalog) {
    catalog
        .plain(Test::TYPE_NAME)
        .method("test_method", "i32", &[])
        .method("add", "i32", &[("a", "i32"), ("b", "i32")])
        .method("greet", "String", &[("name", "&str")])
        .method("log_message", "String", &[("message", "&str")])
        .register();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers() {
        assert_eq!(Test::test_method(), 42);
        assert_eq!(Test::add(2, 3), 5);
        assert_eq!(Test::greet("Ada"), "Hello, Ada! Welcome to Void.");
    }
}
