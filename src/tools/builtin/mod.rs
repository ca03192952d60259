//! Ready-made handlers for the non-function tool kinds.

pub mod computer;
pub mod image;
pub mod mcp;
pub mod shell;

pub use computer::{Computer, ComputerTool, SafetyCheckPolicy};
pub use image::{decode_image, DirectorySink, ImageGenerationTool, ImageSink};
pub use mcp::McpApprovalTool;
pub use shell::LocalShellTool;
