use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, load_settings_from, Settings},
    ChannelEvent, EditForm, EditSessionController, FormSurface, NotificationChannel, PeerPresence,
    PresenceChange, ProjectApi,
};
use shared::domain::{EventFields, EventId, FormBoxId};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; defaults to ./editwatch.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log peers starting and stopping edits on the shared topic.
    Watch,
    /// Keep an editing session open for one event until Ctrl-C.
    Edit {
        #[arg(long)]
        event_id: i64,
        #[arg(long)]
        form_box: Option<String>,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// e.g. 2024-05-02T10:00:00
        #[arg(long)]
        start: NaiveDateTime,
        #[arg(long)]
        end: NaiveDateTime,
    },
}

/// Stands in for the page: every surface call becomes a log line.
struct LoggingSurface;

impl FormSurface for LoggingSurface {
    fn mount(&self, form_box_id: &FormBoxId, form: &EditForm) {
        info!(form_box = %form_box_id, event_id = form.event_id().0, name = %form.fields().name, "surface: mount form");
    }

    fn collapse(&self, form_box_id: &FormBoxId) {
        info!(form_box = %form_box_id, "surface: collapse");
    }

    fn reveal(&self, form_box_id: &FormBoxId, delay: Duration) {
        info!(form_box = %form_box_id, ?delay, "surface: reveal");
    }

    fn clear_errors(&self, form_box_id: &FormBoxId) {
        info!(form_box = %form_box_id, "surface: clear errors");
    }

    fn show_errors(&self, form_box_id: &FormBoxId, errors: &[String]) {
        for error in errors {
            warn!(form_box = %form_box_id, %error, "surface: field error");
        }
    }

    fn refresh(&self) {
        info!("surface: refresh page");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };

    match args.command {
        Command::Watch => watch(&settings).await,
        Command::Edit {
            event_id,
            form_box,
            name,
            description,
            start,
            end,
        } => {
            let form_box = form_box.unwrap_or_else(|| format!("event-{event_id}"));
            let fields = EventFields {
                name,
                description,
                start,
                end,
            };
            edit(&settings, EventId(event_id), FormBoxId::new(form_box), fields).await
        }
    }
}

async fn watch(settings: &Settings) -> Result<()> {
    let channel = NotificationChannel::new(settings.channel_settings()?);
    let mut presence = PeerPresence::new(
        channel.identity().clone(),
        settings.timings().broadcast_period,
    );
    let mut events = BroadcastStream::new(channel.subscribe());
    channel.connect().await?;

    let mut prune = tokio::time::interval(settings.timings().broadcast_period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = prune.tick() => {
                for (event_id, peer) in presence.prune(std::time::Instant::now()) {
                    info!(event_id = event_id.0, %peer, "watch: peer went quiet");
                }
            }
            item = events.next() => match item {
                Some(Ok(ChannelEvent::EditingStatus(notification))) => {
                    match presence.apply(&notification, std::time::Instant::now()) {
                        PresenceChange::Started { event_id, peer } => {
                            info!(event_id = event_id.0, %peer, "watch: peer started editing");
                        }
                        PresenceChange::Stopped { event_id, peer } => {
                            info!(event_id = event_id.0, %peer, "watch: peer stopped editing");
                        }
                        PresenceChange::Unchanged => {}
                    }
                }
                Some(Ok(ChannelEvent::Error(message))) => warn!(%message, "watch: channel error"),
                Some(Ok(ChannelEvent::Disconnected)) | None => {
                    warn!("watch: channel closed");
                    break;
                }
                Some(Err(err)) => warn!(%err, "watch: missed channel events"),
            }
        }
    }

    channel.disconnect().await;
    Ok(())
}

async fn edit(
    settings: &Settings,
    event_id: EventId,
    form_box: FormBoxId,
    fields: EventFields,
) -> Result<()> {
    let channel = NotificationChannel::new(settings.channel_settings()?);
    channel.connect().await?;

    let mut controller = EditSessionController::new(
        channel.clone(),
        Arc::new(LoggingSurface),
        ProjectApi::new(&settings.server_url),
        settings.timings(),
    );
    controller.open_editor(event_id, form_box.clone(), fields);
    info!(event_id = event_id.0, "edit: holding session open; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    controller.close_editor(&form_box);
    channel.disconnect().await;
    Ok(())
}
