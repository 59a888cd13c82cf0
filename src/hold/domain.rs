pub mod model;
pub mod service;

use async_trait::async_trait;
use crate::core::library::CirculationResult;
use crate::hold::dto::HoldDto;

#[async_trait]
pub trait HoldService: Sync + Send {
    async fn place(&self, patron_id: &str, title_id: &str,
                   item_id: Option<&str>) -> CirculationResult<HoldDto>;
    async fn cancel(&self, hold_id: &str, reason: &str) -> CirculationResult<HoldDto>;
    // Cancels pickup-shelf holds whose window lapsed and hands the copy to
    // the next waiter; returns how many holds expired.
    async fn sweep_expired(&self) -> CirculationResult<usize>;
    async fn find_by_patron(&self, patron_id: &str) -> CirculationResult<Vec<HoldDto>>;
    // Active holds for a title in queue order.
    async fn queue_for_title(&self, title_id: &str) -> CirculationResult<Vec<HoldDto>>;
}
