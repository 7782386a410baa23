use crate::config::Config;
use crate::db::ledger_repository::LedgerRepository;
use crate::services::reservation::ReservationCoordinator;
use crate::services::settlement::SettlementProcessor;
use crate::services::stripe::PaymentGateway;
use crate::utils::jwt::JwtKeys;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub reservations: Arc<ReservationCoordinator>,
    pub settlement: Arc<SettlementProcessor>,
    pub ledger: Arc<dyn LedgerRepository>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<Config>,
    pub jwt_keys: Arc<JwtKeys>,
}
