//! Rule-based fallback engine
//!
//! Classifies one utterance, extracts its slots and composes the reply.
//! Used when no LLM is reachable, and by the assistant to interpret model
//! replies that carry no structured action.

use chrono::NaiveDateTime;
use rand::Rng;

use crate::compose::{compose, ComposeContext, TaskActions};
use crate::intent::IntentParser;
use crate::slots::{SlotExtractor, SubjectFallback};
use crate::types::Task;

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEngine {
    parser: IntentParser,
}

impl FallbackEngine {
    pub fn new(subject_fallback: SubjectFallback) -> Self {
        Self {
            parser: IntentParser::new(SlotExtractor::new(subject_fallback)),
        }
    }

    pub fn parser(&self) -> &IntentParser {
        &self.parser
    }

    pub fn respond(
        &self,
        utterance: &str,
        tasks: &[Task],
        ctx: &ComposeContext,
        actions: Option<&mut dyn TaskActions>,
    ) -> String {
        self.respond_with_rng(utterance, tasks, ctx, actions, &mut rand::thread_rng())
    }

    pub fn respond_with_rng<R: Rng + ?Sized>(
        &self,
        utterance: &str,
        tasks: &[Task],
        ctx: &ComposeContext,
        actions: Option<&mut dyn TaskActions>,
        rng: &mut R,
    ) -> String {
        let intent = self.parser.parse(utterance, ctx.now, rng);
        compose(&intent, tasks, ctx, actions)
    }
}

/// One-shot fallback reply with the default subject policy
pub fn fallback_response(
    utterance: &str,
    tasks: &[Task],
    now: NaiveDateTime,
    actions: Option<&mut dyn TaskActions>,
) -> String {
    FallbackEngine::default().respond(utterance, tasks, &ComposeContext::new(now), actions)
}
