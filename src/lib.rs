//! Token-keyed runtime dependency injection.
//!
//! Services are registered in a [`Container`] under opaque [`Token`]s and
//! resolved by token. Tokens compare by identity, so two tokens created with
//! the same name never collide. The name only shows up in diagnostics and
//! errors.
//!
//! By default, services are held in `Arc<T>` and the container can be shared
//! between threads. If thread safety isn't needed, disable default features
//! and enable the "rc" feature instead:
//!
//! ```text
//! token_injector = {
//!     version = "*",
//!     default_features = false,
//!     features = ["rc"]
//! }
//! ```
//!
//! # Declaring dependencies
//!
//! A type that the container constructs implements [`Injectable`]. Its
//! [`Injectable::dependencies`] manifest lists the fields it needs and the
//! tokens those fields come from. By the time [`Injectable::construct`] is
//! called, every one of them has been resolved. A derived type extends the
//! manifest of its base type with [`Dependencies::merge`], and its own
//! entries win when a field name is declared by both.
//!
//! Manifests can also reference a type instead of a token with
//! [`Dependencies::inject_type`]. If nothing is registered under that type's
//! derived token, the container's [`AutoWire`] policy decides whether the
//! type is materialized on first use.
//!
//! # Service lifetimes
//!
//! Every registration has a [`Scope`]:
//!
//! - Transient: a new instance is created wherever the service is needed.
//! - Request: one instance is shared by everything created during a single
//!   call to [`Container::resolve`].
//! - Singleton: one instance is created the first time the service is needed
//!   and reused after that.
//! - Constant: a pre-built value is registered and handed out as is.
//!
//! # Validation
//!
//! Every registration is checked for dependency cycles when it is made, and
//! a registration that would close one is rejected with
//! [`InjectError::CyclicDependency`]. Dependencies that aren't registered
//! yet are allowed at registration time. They only become an error when a
//! service that needs them is resolved.
//!
//! # Example
//!
//! ```
//! use token_injector::{
//!     Class, Container, Dependencies, InjectResult, Injectable, Injected,
//!     Svc, Token,
//! };
//! use std::error::Error;
//!
//! // Marker types whose derived tokens name our services.
//! struct DatabaseUrl;
//! struct Database;
//!
//! struct SqlDatabase {
//!     url: Svc<String>,
//! }
//!
//! impl Injectable for SqlDatabase {
//!     fn dependencies() -> Dependencies {
//!         Dependencies::new().inject("url", Token::of::<DatabaseUrl>())
//!     }
//!
//!     fn construct(injected: &Injected) -> InjectResult<Self> {
//!         Ok(SqlDatabase {
//!             url: injected.get("url")?,
//!         })
//!     }
//! }
//!
//! struct UserService {
//!     database: Svc<SqlDatabase>,
//! }
//!
//! impl Injectable for UserService {
//!     fn dependencies() -> Dependencies {
//!         Dependencies::new().inject("database", Token::of::<Database>())
//!     }
//!
//!     fn construct(injected: &Injected) -> InjectResult<Self> {
//!         Ok(UserService {
//!             database: injected.get("database")?,
//!         })
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn Error>> {
//!     let users = Token::new("users");
//!
//!     // Nothing is constructed until it is resolved, so registrations can
//!     // be made in any order.
//!     let mut container = Container::new();
//!     container.add_transient(users, Class::<UserService>::new())?;
//!     container.add_singleton(
//!         Token::of::<Database>(),
//!         Class::<SqlDatabase>::new(),
//!     )?;
//!     container.add_constant(
//!         Token::of::<DatabaseUrl>(),
//!         String::from("postgres://localhost"),
//!     )?;
//!
//!     let first: Svc<UserService> = container.resolve(users)?;
//!     let second: Svc<UserService> = container.resolve(users)?;
//!     assert!(!Svc::ptr_eq(&first, &second));
//!     assert!(Svc::ptr_eq(&first.database, &second.database));
//!     assert_eq!("postgres://localhost", first.database.url.as_str());
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::needless_pass_by_value
)]

#[cfg(not(any(feature = "arc", feature = "rc")))]
compile_error!(
    "Either the 'arc' or 'rc' feature must be enabled (but not both)."
);

#[cfg(all(feature = "arc", feature = "rc"))]
compile_error!(
    "The 'arc' and 'rc' features are mutually exclusive and cannot be enabled together."
);

mod activation;
mod builder;
mod container;
mod dependency;
mod descriptor;
mod error;
mod graph;
mod plan;
mod registry;
mod scope;
mod service;
mod token;

pub use builder::*;
pub use container::*;
pub use dependency::*;
pub use descriptor::*;
pub use error::*;
pub use plan::Plan;
pub use scope::Scope;
pub use service::*;
pub use token::*;
