//! Photo analysis: the analyzer boundary and the reply parser.

mod client;
pub mod parser;

pub use client::{AnalysisError, Analyzer, CommandAnalyzer, StubAnalyzer};
pub use parser::{parse, ParseOutcome};
#[allow(unused_imports)]
pub use parser::{NutrientValue, ParsedAnalysis};

use std::sync::Arc;

use crate::config::{AnalyzerConfig, AnalyzerKind};

/// Builds the analyzer selected in the configuration.
pub fn from_config(config: &AnalyzerConfig) -> Result<Arc<dyn Analyzer>, String> {
    match config.kind {
        AnalyzerKind::Stub => Ok(Arc::new(StubAnalyzer::new(config.reply.clone()))),
        AnalyzerKind::Command => {
            let program = config
                .program
                .clone()
                .filter(|p| !p.trim().is_empty())
                .ok_or("analyzer.kind is 'command' but analyzer.program is not set")?;
            Ok(Arc::new(CommandAnalyzer::new(program, config.args.clone())))
        }
    }
}
