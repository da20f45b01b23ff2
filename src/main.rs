use std::{process, sync::Arc, time::Duration as StdDuration};

use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        auth::AuthService,
        error::AppError,
        follows::FollowService,
        groups::{CreateGroupCommand, GroupService},
        pagination::Paginator,
        posts::{ImageStore, PostService},
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, HealthRepo, PostsRepo, PostsWriteRepo,
            SessionsRepo, UsersRepo,
        },
    },
    cache::{PageCache, PageCacheConfig, PageCacheState},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::MediaStorage,
    },
};

const SESSION_PURGE_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Groups(args) => run_groups(settings, args.command).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings)?;

    let purge_handle = spawn_session_purge(state.auth.clone());
    let cache_purge_handle = spawn_page_cache_purge(state.page_cache.store.clone());
    let result = serve_http(&settings, state).await;

    for handle in [purge_handle, cache_purge_handle] {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_groups(
    settings: config::Settings,
    command: config::GroupsCommand,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    let service = GroupService::new(groups_repo);

    match command {
        config::GroupsCommand::Create(args) => {
            let group = service
                .create(CreateGroupCommand {
                    title: args.title,
                    slug: args.slug,
                    description: args.description,
                })
                .await?;
            println!("created group `{}` ({})", group.slug, group.title);
        }
        config::GroupsCommand::Delete(args) => {
            service.delete(&args.slug).await?;
            println!("deleted group `{}`", args.slug);
        }
        config::GroupsCommand::List => {
            for group in service.list().await? {
                println!("{}\t{}", group.slug, group.title);
            }
        }
    }

    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let media = Arc::new(
        MediaStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::from(err)))?,
    );
    let image_store: Arc<dyn ImageStore> = media.clone();

    let session_ttl = time::Duration::try_from(settings.auth.session_ttl)
        .map_err(|err| AppError::validation(format!("auth.session_ttl_seconds: {err}")))?;
    let upload_limit_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|err| AppError::validation(format!("uploads.max_request_bytes: {err}")))?;

    let posts = PostService::new(
        posts_repo,
        posts_write_repo,
        groups_repo,
        users_repo.clone(),
        comments_repo,
        follows_repo.clone(),
        image_store,
        Paginator::default(),
    );
    let auth = AuthService::new(users_repo.clone(), sessions_repo, session_ttl);
    let follows = FollowService::new(users_repo, follows_repo);

    Ok(HttpState {
        posts: Arc::new(posts),
        auth: Arc::new(auth),
        follows: Arc::new(follows),
        health: health_repo,
        media,
        page_cache: PageCacheState::new(PageCacheConfig::from(&settings.cache)),
        secure_cookies: settings.auth.secure_cookies,
        upload_limit_bytes,
    })
}

fn spawn_session_purge(auth: Arc<AuthService>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(err) = auth.purge_expired_sessions().await {
                warn!(
                    target = "yatube::main",
                    error = %err,
                    "failed to purge expired sessions"
                );
            }
        }
    })
}

/// Drop expired pages once per cache window.
fn spawn_page_cache_purge(cache: Arc<PageCache>) -> tokio::task::JoinHandle<()> {
    let every = cache.ttl().max(StdDuration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                debug!(
                    target = "yatube::main",
                    removed,
                    "purged expired cached pages"
                );
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let page_cache = state.page_cache.store.clone();
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "yatube::main",
        addr = %settings.server.addr,
        cache_ttl_secs = page_cache.ttl().as_secs(),
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(grace))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    page_cache.clear();
    Ok(())
}

/// Resolve on Ctrl+C, then arm a watchdog that exits if draining takes longer than `grace`.
async fn shutdown_signal(grace: StdDuration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "yatube::main",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }

    info!(
        target = "yatube::main",
        grace_secs = grace.as_secs(),
        "shutting down"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(
            target = "yatube::main",
            "graceful shutdown timed out; exiting"
        );
        process::exit(1);
    });
}
