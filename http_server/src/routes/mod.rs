mod get_updates;
mod update;

use actix_web::web;

use crate::errors::ApiError;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .configure(update::init_routes)
    .configure(get_updates::init_routes);
}
