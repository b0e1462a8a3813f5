#[cfg(test)]
pub mod test {
    use indexmap::IndexMap;
    use serde::Deserialize;

    use crate::schema::{Schema, Section, SectionBuilder};

    /// Application schema covering every field type and three levels of nesting.
    pub struct AppSchema;

    impl Schema for AppSchema {
        fn declare(root: &mut SectionBuilder) {
            root.property("name", "demo".to_string())
                .comment("Application name.");
            root.property("count", 1i32)
                .comment("How many workers to start.");
            root.property("ratio", 0.5f32);
            root.property("verbose", false);
            root.property("tags", vec!["alpha".to_string()]);
            root.section::<ServerSection>();
            root.section_with("logging", |s| {
                s.comment("Logging settings.");
                s.property("level", "info".to_string());
            });
        }
    }

    pub struct ServerSection;

    impl Section for ServerSection {
        const KEY: &'static str = "server";

        fn declare(s: &mut SectionBuilder) {
            s.comment("Server settings.");
            s.property("host", "127.0.0.1".to_string())
                .comment("Address to bind.");
            s.property("port", 8080i32);
            s.property("backlog", 16i8);
            s.property("retries", 3i16);
            s.property("max_body", 1_048_576i64);
            s.property("timeout", 2.5f64);
            s.property("limits", IndexMap::<String, i64>::new());
            s.section::<TlsSection>();
        }
    }

    pub struct TlsSection;

    impl Section for TlsSection {
        const KEY: &'static str = "tls";

        fn declare(s: &mut SectionBuilder) {
            s.comment("TLS settings.");
            s.property("cert", None::<String>)
                .comment("Path to the certificate.")
                .comment("Leave unset to disable TLS.");
            s.property("enabled", false);
        }
    }

    /// `x` at the root and `name` two sections deep.
    pub struct Nested;

    impl Schema for Nested {
        fn declare(root: &mut SectionBuilder) {
            root.property("x", 0i32);
            root.section_with("a", |a| {
                a.section_with("b", |b| {
                    b.property("name", "n".to_string());
                });
            });
        }
    }

    /// `{ int count = 1; section "a" { string name = null; } }`
    pub struct Counter;

    impl Schema for Counter {
        fn declare(root: &mut SectionBuilder) {
            root.property("count", 1i32);
            root.section_with("a", |a| {
                a.property("name", None::<String>);
            });
        }
    }

    /// A section that declares itself as its own child.
    pub struct Looping;

    impl Section for Looping {
        const KEY: &'static str = "loop";

        fn declare(s: &mut SectionBuilder) {
            s.section::<Looping>();
        }
    }

    impl Schema for Looping {
        fn declare(root: &mut SectionBuilder) {
            root.section::<Looping>();
        }
    }

    #[derive(Deserialize, Debug, PartialEq)]
    pub struct AppConfig {
        pub name: String,
        pub count: i32,
        pub ratio: f32,
        pub verbose: bool,
        pub tags: Vec<String>,
        pub server: ServerConfig,
    }

    #[derive(Deserialize, Debug, PartialEq)]
    pub struct ServerConfig {
        pub host: String,
        pub port: u16,
        pub tls: TlsConfig,
    }

    #[derive(Deserialize, Debug, PartialEq)]
    pub struct TlsConfig {
        pub cert: Option<String>,
        pub enabled: bool,
    }
}
