//! Render masters and gate them on technical acceptance criteria.

pub mod ffmpeg;
pub mod qa_gate;
pub mod renderer;
