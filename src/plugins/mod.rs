//! Plugin system for katmer.
//!
//! Currently hosts the Jinja2-compatible filter plugins used by
//! [`crate::template`]. See the [`filter`] module for the available filters.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use katmer::plugins::filter::FilterRegistry;
//! use minijinja::Environment;
//!
//! let mut env = Environment::new();
//! FilterRegistry::register_all(&mut env);
//! ```
//!
//! # Creating a custom filter
//!
//! Filters are registered directly with the minijinja environment:
//!
//! ```rust,ignore
//! use minijinja::Environment;
//!
//! fn my_custom_filter(value: String) -> String {
//!     value.to_uppercase()
//! }
//!
//! let mut env = Environment::new();
//! env.add_filter("my_filter", my_custom_filter);
//! ```

pub mod filter;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use super::filter::FilterRegistry;
}
