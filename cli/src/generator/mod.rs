pub mod synthetic;

pub use synthetic::{GeneratorConfig, SyntheticSource};
