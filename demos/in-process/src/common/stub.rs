use std::sync::Arc;

use rpc_bridge::{ManyBridge, OneBridge};

use super::{calculator::CalculatorService, wire::Wire};

/// Client stub: every call crosses a [`Wire`] in each direction
#[derive(Clone)]
pub struct CalculatorStub {
    server: Arc<dyn CalculatorService>,
}

impl CalculatorStub {
    pub fn new(server: impl CalculatorService) -> Self {
        Self {
            server: Arc::new(server),
        }
    }

    pub fn double(&self, request: u64, response: OneBridge<u64>) {
        self.server
            .double(request, Box::new(Wire::connect("double", response)))
    }

    pub fn count_to(&self, request: u32, responses: ManyBridge<u32>) {
        self.server
            .count_to(request, Box::new(Wire::connect("count_to", responses)))
    }

    pub fn sum(&self, response: OneBridge<u64>) -> Wire<u64> {
        let requests = self
            .server
            .sum(Box::new(Wire::connect("sum.response", response)));
        Wire::connect("sum.requests", requests)
    }

    pub fn shout(&self, responses: ManyBridge<String>) -> Wire<String> {
        let requests = self
            .server
            .shout(Box::new(Wire::connect("shout.responses", responses)));
        Wire::connect("shout.requests", requests)
    }
}
