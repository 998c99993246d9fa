//! Deterministic extraction oracle for tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

use coachlink_addr::services::{ExtractionOracle, OracleError, OracleInput};

/// Answers from a fixed identity → address table
///
/// Identities missing from the table are answered with the "无法识别"
/// sentinel. The first `failures` calls fail with a network error.
#[derive(Default)]
pub struct FakeOracle {
    addresses: HashMap<String, String>,
    failures: Mutex<u32>,
    calls: Mutex<Vec<Vec<String>>>,
    gate: Option<Arc<Semaphore>>,
    entered: Arc<Notify>,
}

impl FakeOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, identity: &str, address: &str) -> Self {
        self.addresses.insert(identity.to_string(), address.to_string());
        self
    }

    pub fn failing_first(self, failures: u32) -> Self {
        *self.failures.lock().unwrap() = failures;
        self
    }

    pub fn always_failing(self) -> Self {
        self.failing_first(u32::MAX)
    }

    /// Block every call until a permit is added to `gate`
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Notified each time a call starts
    pub fn entered(&self) -> Arc<Notify> {
        Arc::clone(&self.entered)
    }

    /// Identities of each call, in call order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl ExtractionOracle for FakeOracle {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn extract(&self, batch: &[OracleInput]) -> Result<String, OracleError> {
        self.calls
            .lock()
            .unwrap()
            .push(batch.iter().map(|input| input.identity.clone()).collect());
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| OracleError::NetworkError(e.to_string()))?;
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(OracleError::NetworkError("connection refused".to_string()));
            }
        }

        let answer = batch
            .iter()
            .map(|input| match self.addresses.get(&input.identity) {
                Some(address) => format!(
                    "用户标识: {} | 地址分析结果: {} (原文: {})",
                    input.identity, address, input.body
                ),
                None => format!("用户标识: {} | 地址分析结果: 无法识别", input.identity),
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(answer)
    }
}
