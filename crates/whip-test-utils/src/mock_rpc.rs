//! Mock affinity-routed RPC client with a call journal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use whip_gateway::rpc::{
    HandlerRpcClient, IceRestartRequest, IceRestartResponse, RpcError, TeardownRequest,
};

/// One recorded RPC invocation.
#[derive(Debug, Clone)]
pub enum RpcCall {
    Teardown {
        resource_id: String,
        request: TeardownRequest,
    },
    IceRestart {
        resource_id: String,
        request: IceRestartRequest,
    },
}

/// Mock RPC client. Scripted results, recorded calls.
pub struct MockRpcClient {
    teardown_result: Mutex<Result<(), RpcError>>,
    restart_result: Mutex<Result<IceRestartResponse, RpcError>>,
    calls: Mutex<Vec<RpcCall>>,
}

impl Default for MockRpcClient {
    fn default() -> Self {
        Self {
            teardown_result: Mutex::new(Ok(())),
            restart_result: Mutex::new(Ok(IceRestartResponse {
                trickle_ice_sdpfrag: crate::fixtures::TRICKLE_FRAGMENT.to_string(),
            })),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockRpcClient {
    /// Client that acknowledges teardown and answers restarts with the
    /// fixture fragment.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the teardown result.
    pub fn teardown_result(self, result: Result<(), RpcError>) -> Self {
        *self.teardown_result.lock().unwrap() = result;
        self
    }

    /// Script the restart result.
    pub fn restart_result(self, result: Result<IceRestartResponse, RpcError>) -> Self {
        *self.restart_result.lock().unwrap() = result;
        self
    }

    /// Script the restart to answer with this fragment.
    pub fn restart_fragment(self, fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        *self.restart_result.lock().unwrap() = Ok(IceRestartResponse {
            trickle_ice_sdpfrag: fragment,
        });
        self
    }

    /// Finish building.
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<RpcCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HandlerRpcClient for MockRpcClient {
    async fn teardown(
        &self,
        resource_id: &str,
        request: TeardownRequest,
        _timeout: Duration,
    ) -> Result<(), RpcError> {
        self.calls.lock().unwrap().push(RpcCall::Teardown {
            resource_id: resource_id.to_string(),
            request,
        });
        self.teardown_result.lock().unwrap().clone()
    }

    async fn ice_restart(
        &self,
        resource_id: &str,
        request: IceRestartRequest,
        _timeout: Duration,
    ) -> Result<IceRestartResponse, RpcError> {
        self.calls.lock().unwrap().push(RpcCall::IceRestart {
            resource_id: resource_id.to_string(),
            request,
        });
        self.restart_result.lock().unwrap().clone()
    }
}
