//! Currency oracle: does the model already know this subject well enough?
//!
//! Advisory only. Every failure reads as "no current knowledge".

use std::sync::Arc;

use tracing::{info, instrument, warn};

use topicdoc_shared::TopicContext;

use crate::llm::{GenerationError, Generator};
use crate::prompts;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("answer was neither yes nor no: {0:?}")]
    Unparseable(String),
}

#[derive(Clone)]
pub struct CurrencyOracle {
    generator: Arc<dyn Generator>,
}

impl CurrencyOracle {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// One yes/no model call. Never fails; errors count as `false`.
    #[instrument(skip_all, fields(subject = %ctx.subject()))]
    pub async fn has_current_knowledge(&self, ctx: &TopicContext) -> bool {
        match self.ask(ctx).await {
            Ok(current) => {
                info!(current, "currency check answered");
                current
            }
            Err(e) => {
                warn!(error = %e, "currency check failed, assuming no current knowledge");
                false
            }
        }
    }

    async fn ask(&self, ctx: &TopicContext) -> Result<bool, OracleError> {
        let answer = self.generator.generate(&prompts::currency_check(ctx)).await?;
        parse_answer(&answer)
    }
}

fn parse_answer(answer: &str) -> Result<bool, OracleError> {
    let mut saw_no = false;
    for word in answer.split(|c: char| !c.is_alphanumeric()) {
        if word.eq_ignore_ascii_case("yes") {
            return Ok(true);
        }
        saw_no |= word.eq_ignore_ascii_case("no");
    }
    if saw_no {
        Ok(false)
    } else {
        Err(OracleError::Unparseable(answer.chars().take(80).collect()))
    }
}
