pub mod agent;
pub mod feedback;
pub mod system;
pub mod validation;
