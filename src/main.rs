mod api;
mod app;
mod banner;
mod config;
mod console;
mod playback;
mod player;
mod recorder;
mod session;

use std::io::BufRead;
use std::time::Duration;

use app::{AppState, ControllerEvent};
use config::Config;
use session::Session;

fn main() {
    env_logger::init();

    let config = Config::load();
    let session = Session::load();
    log::info!("Server: {}", config.server_url);

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    let (tx, rx) = async_channel::unbounded::<ControllerEvent>();

    let mut state = AppState::new(config, session, tx.clone());

    // stdin stays on a plain thread; lines become command events.
    {
        let tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match console::parse_command(&line) {
                    Ok(Some(cmd)) => {
                        if tx.send_blocking(ControllerEvent::Command(cmd)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(msg) => console::print_error(&msg),
                }
                console::print_prompt();
            }
            let _ = tx.send_blocking(ControllerEvent::InputClosed);
        });
    }

    // The event loop runs on this thread via block_on; AppState holds cpal
    // streams, which must not cross threads.
    rt.block_on(async move {
        // 1Hz tick for timers, banners and playback progress.
        {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(1));
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if tx.send(ControllerEvent::Tick).await.is_err() {
                        return;
                    }
                }
            });
        }

        // Poll the server processing flag every 3s, whether or not a local
        // job is running; a job started elsewhere locks the controls.
        {
            let api = state.api.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(3));
                loop {
                    interval.tick().await;
                    match api.processing_status().await {
                        Ok(busy) => {
                            if tx.send(ControllerEvent::StatusPolled(busy)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => log::debug!("Status poll failed: {e}"),
                    }
                }
            });
        }

        console::print_status("Pashto voice Q&A client. Type 'help' for commands.");
        if let Some(ts) = &state.timestamp {
            console::print_status(&format!(
                "Resumed session from job {ts}. 'play question' / 'play answer' still work."
            ));
        }
        console::print_prompt();

        while let Ok(event) = rx.recv().await {
            app::handle_event(&mut state, event);
            if state.quit {
                break;
            }
        }
    });

    log::info!("Shutdown");
}
