mod auth;
mod config;
mod email;
mod errors;
mod handlers;
mod middleware;
mod models;
mod policy;

use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use dotenv::dotenv;

use email::Mailer;
use middleware::Authentication;

async fn liveness() -> HttpResponse {
    HttpResponse::Ok().body("Vroum API is running")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env();

    let database = config::init_database(&config)
        .await
        .expect("Failed to connect to database");

    let mailer = Mailer::from_config(&config.email);

    let port = config.port;
    let frontend_url = config.frontend_url.clone();

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(1)
        .burst_size(60)
        .finish()
        .unwrap();

    log::info!("listening on port {}", port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(Governor::new(&governor_conf))
            .wrap(Authentication)
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(database.clone()))
            .app_data(web::Data::new(mailer.clone()))
            .route("/", web::get().to(liveness))
            .service(
                web::scope("/api")
                    .service(
                        web::scope("/auth")
                            .service(handlers::auth::register)
                            .service(handlers::auth::login)
                            .service(handlers::auth::forgot_password)
                            .service(handlers::auth::reset_password)
                            .service(handlers::auth::get_me)
                            .service(handlers::auth::contact),
                    )
                    .service(
                        // Literal paths before `/{id}` so they are not
                        // swallowed by the parameter route.
                        web::scope("/users")
                            .service(handlers::users::toggle_favorite)
                            .service(handlers::users::get_favorite_vehicles)
                            .service(handlers::users::get_users)
                            .service(handlers::users::get_user)
                            .service(handlers::users::update_user)
                            .service(handlers::users::delete_user),
                    )
                    .service(
                        web::scope("/vehicles")
                            .service(handlers::vehicles::get_vehicle_addition_stats)
                            .service(handlers::vehicles::get_vehicles)
                            .service(handlers::vehicles::create_vehicle)
                            .service(handlers::vehicles::get_vehicle)
                            .service(handlers::vehicles::update_vehicle)
                            .service(handlers::vehicles::delete_vehicle),
                    )
                    .service(
                        web::scope("/reservations")
                            .service(handlers::reservations::get_my_reservations)
                            .service(handlers::reservations::get_reservation_status_stats)
                            .service(handlers::reservations::create_reservation)
                            .service(handlers::reservations::cancel_reservation)
                            .service(handlers::reservations::update_reservation_status),
                    )
                    .service(
                        web::scope("/testdrives")
                            .service(handlers::testdrives::get_my_test_drives)
                            .service(handlers::testdrives::get_test_drive_status_stats)
                            .service(handlers::testdrives::create_test_drive)
                            .service(handlers::testdrives::cancel_test_drive)
                            .service(handlers::testdrives::update_test_drive_status),
                    )
                    .service(
                        web::scope("/favorites")
                            .service(handlers::favorites::add_favorite)
                            .service(handlers::favorites::get_favorites)
                            .service(handlers::favorites::remove_favorite),
                    ),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
