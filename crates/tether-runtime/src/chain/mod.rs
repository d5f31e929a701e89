//! Invocation handler chain.
//!
//! A chain is an ordered list of stages around one terminal handler. For a
//! call the runner walks the stages forward running `before`, invokes the
//! terminal, then walks back running `after` (only while the call is still
//! succeeding) and `after_completion` (always, for every stage that was
//! entered). Stage requirements are checked before each stage and before the
//! terminal.

pub mod stages;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use tether_core::error::Result;
use tether_core::protocol::Response;

use crate::invocation::{Requirement, RpcInvocation};

pub use stages::{LoadBalanceStage, RequireAttributes, ResponseFraming, ResultCoercion};

/// What a call produced before result coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Value),
    Response(Response),
}

/// One cross-cutting step of a chain.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower runs further out.
    fn order(&self) -> i32 {
        0
    }

    fn requirements(&self) -> &[Requirement] {
        &[]
    }

    async fn before(&self, _inv: &mut RpcInvocation) -> Result<()> {
        Ok(())
    }

    async fn after(&self, _inv: &mut RpcInvocation, outcome: Outcome) -> Result<Outcome> {
        Ok(outcome)
    }

    /// Runs whether the call succeeded or not. The default passes the result
    /// through unchanged.
    async fn after_completion(
        &self,
        _inv: &RpcInvocation,
        result: Result<Outcome>,
    ) -> Result<Outcome> {
        result
    }
}

/// Innermost handler of a chain.
#[async_trait]
pub trait Terminal: Send + Sync {
    fn requirements(&self) -> &[Requirement] {
        &[]
    }

    async fn invoke(&self, inv: &mut RpcInvocation) -> Result<Outcome>;
}

/// Immutable, pre-sorted stage list plus terminal.
#[derive(Clone)]
pub struct Chain {
    stages: Vec<Arc<dyn Stage>>,
    terminal: Arc<dyn Terminal>,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Chain {
    pub fn builder(terminal: Arc<dyn Terminal>) -> ChainBuilder {
        ChainBuilder {
            stages: Vec::new(),
            terminal,
        }
    }

    /// Stage names in run order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, inv: &mut RpcInvocation) -> Result<Outcome> {
        let mut entered = 0usize;
        let mut passed = 0usize;
        let mut failure = None;

        for stage in &self.stages {
            if let Err(e) = inv.attributes.check_all(stage.requirements()) {
                tracing::debug!(stage = stage.name(), error = %e, "stage requirement not met");
                failure = Some(e);
                break;
            }
            entered += 1;
            if let Err(e) = stage.before(inv).await {
                failure = Some(e);
                break;
            }
            passed += 1;
        }

        let mut result = match failure {
            Some(e) => Err(e),
            None => match inv.attributes.check_all(self.terminal.requirements()) {
                Ok(()) => self.terminal.invoke(inv).await,
                Err(e) => Err(e),
            },
        };

        for (idx, stage) in self.stages.iter().enumerate().take(entered).rev() {
            if idx < passed {
                result = match result {
                    Ok(outcome) => stage.after(inv, outcome).await,
                    Err(e) => Err(e),
                };
            }
            result = stage.after_completion(inv, result).await;
        }

        result
    }
}

pub struct ChainBuilder {
    stages: Vec<Arc<dyn Stage>>,
    terminal: Arc<dyn Terminal>,
}

impl ChainBuilder {
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sorts stages by `order()`; equal orders keep insertion order.
    pub fn build(mut self) -> Chain {
        self.stages.sort_by_key(|s| s.order());
        Chain {
            stages: self.stages,
            terminal: self.terminal,
        }
    }
}
