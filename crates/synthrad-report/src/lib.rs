//! # SynthRad 报告渲染
//!
//! 按放射科医生书写风格将病例渲染为自由文本CT报告。

pub mod phrases;
pub mod renderer;
pub mod styles;

pub use phrases::{PhraseProvider, SeededPhraseProvider, ThreadPhraseProvider};
pub use renderer::{fmt_mm, IntervalChange, IntervalSummary, ReportRenderer};
pub use styles::{phrases_for, StylePhrases};
