pub mod report;
pub mod settings;
pub mod student;
pub mod visit;

pub use report::*;
pub use settings::*;
pub use student::*;
pub use visit::*;
