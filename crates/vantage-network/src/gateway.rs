use std::fmt;

use async_trait::async_trait;
use vantage_types::{
    game::{GameSnapshot, UciMove},
    Result,
};

/// Result of `POST /move`. A rejection is an expected answer, not a
/// transport failure.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Accepted(GameSnapshot),
    Rejected(String),
}

/// The only path to the backend. Every response is normalized into a
/// [`GameSnapshot`] that replaces client state wholesale.
#[async_trait]
pub trait SyncGateway: Send + Sync {
    async fn get_state(&self) -> Result<GameSnapshot>;
    async fn submit_move(&self, mv: &UciMove) -> Result<MoveOutcome>;
    /// The backend clamps `view` into `0..=len`.
    async fn goto(&self, view: u32) -> Result<GameSnapshot>;
    async fn engine_move(&self) -> Result<GameSnapshot>;
    fn endpoint(&self) -> String;
}

/// A gateway operation as data, so the session can issue requests without
/// holding the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCall {
    GetState,
    SubmitMove(UciMove),
    Goto(u32),
    EngineMove,
}

impl GatewayCall {
    /// Whether the call changes backend state (plies or view).
    pub fn is_mutating(&self) -> bool {
        !matches!(self, GatewayCall::GetState)
    }
}

impl fmt::Display for GatewayCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayCall::GetState => write!(f, "GET /state"),
            GatewayCall::SubmitMove(mv) => write!(f, "POST /move {mv}"),
            GatewayCall::Goto(view) => write!(f, "POST /goto {view}"),
            GatewayCall::EngineMove => write!(f, "POST /engine_move"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayReply {
    Snapshot(GameSnapshot),
    Move(MoveOutcome),
}

pub async fn dispatch<G>(gateway: &G, call: GatewayCall) -> Result<GatewayReply>
where
    G: SyncGateway + ?Sized,
{
    Ok(match call {
        GatewayCall::GetState => GatewayReply::Snapshot(gateway.get_state().await?),
        GatewayCall::SubmitMove(mv) => GatewayReply::Move(gateway.submit_move(&mv).await?),
        GatewayCall::Goto(view) => GatewayReply::Snapshot(gateway.goto(view).await?),
        GatewayCall::EngineMove => GatewayReply::Snapshot(gateway.engine_move().await?),
    })
}
