pub mod chart;
pub mod dialect;
pub mod llm_service;
pub mod loader;
pub mod pdf_export;
pub mod presenter;
pub mod resolver;

pub use chart::*;
pub use dialect::*;
pub use llm_service::*;
pub use loader::*;
pub use pdf_export::*;
pub use presenter::*;
pub use resolver::*;
