pub mod assets;
pub mod deadline;
pub mod response;
pub mod validation;
