// promptshelf services
// Backend client, bookmark/category/like/trending domain services, settings and logging.

pub mod api_client;
pub mod bookmark_service;
pub mod category_service;
pub mod invalidation;
pub mod like_service;
pub mod logging;
pub mod settings_engine;
pub mod trending_ranker;
