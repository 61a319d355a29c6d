//! Footprint routes: CRUD on `/:model`, `/:model/:id`, and association CRUD on `/:model/:id/:relation`.

use crate::handlers::footprint::{
    create, create_association, destroy, destroy_association, destroy_one, find, find_association, find_one, update,
    update_association, update_one,
};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn footprint_routes(state: AppState) -> Router {
    Router::new()
        .route("/:model", get(find).post(create).patch(update).delete(destroy))
        .route("/:model/:id", get(find_one).patch(update_one).delete(destroy_one))
        .route(
            "/:model/:id/:relation",
            get(find_association)
                .post(create_association)
                .patch(update_association)
                .delete(destroy_association),
        )
        .with_state(state)
}
