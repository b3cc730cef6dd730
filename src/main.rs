use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent,
    MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use tracing::{info, warn};

use travel_map::app::App;
use travel_map::config::{Args, MapConfig};
use travel_map::lifecycle::{MapLifecycle, MapSettings};
use travel_map::map::FsFetcher;
use travel_map::marker::MarkerDataSource;
use travel_map::navigation::{ExternalLocation, Navigator, PageRouter, Router};
use travel_map::{data, logging, ui};

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = logging::init_logging(&args.log_dir)?;

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    // Run the app
    let result = run(&mut terminal, &args);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    if let Ok(Some(url)) = &result {
        println!("{url}");
    }
    result.map(|_| ())
}

fn load_markers(args: &Args) -> MarkerDataSource {
    let Some(path) = args.markers_path() else {
        return MarkerDataSource::builtin();
    };
    match MarkerDataSource::load(&path) {
        Ok(markers) => markers,
        Err(e) => {
            warn!(path = %path.display(), error = %format!("{e:#}"), "failed to load markers, using built-in list");
            MarkerDataSource::builtin()
        }
    }
}

fn build_app(args: &Args, width: usize, height: usize) -> Result<App> {
    let config = MapConfig::resolve(args)?;
    let markers = load_markers(args);

    let router = (!args.no_router).then(|| Rc::new(PageRouter::from_markers(&markers)));
    let location = Rc::new(ExternalLocation::new(args.site_url.as_str()));
    let navigator = Navigator::new(router.clone().map(|r| r as Rc<dyn Router>), location.clone());

    let mut settings = MapSettings::new(Arc::new(FsFetcher::new(&args.data_dir)));
    settings.view = config.view;
    settings.region = config.region;
    settings.region_keys = config.region_keys;
    settings.base_features = data::load_base_features(&args.data_dir);
    settings.markers = markers;

    info!(?settings, router = router.is_some(), "starting");
    Ok(App::new(MapLifecycle::new(settings, navigator), router, location, width, height))
}

/// Handle mouse events for hover, click, panning and zooming
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::Moved => app.pointer_moved(mouse.column, mouse.row),
        // Scroll wheel for zooming towards mouse position
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => app.begin_press(mouse.column, mouse.row),
        // Click and drag to pan
        MouseEventKind::Drag(MouseButton::Left) => {
            app.mouse_pos = Some((mouse.column, mouse.row));
            app.handle_drag(mouse.column, mouse.row);
        }
        MouseEventKind::Up(MouseButton::Left) => app.end_press(mouse.column, mouse.row),
        _ => {}
    }
}

/// Returns the full-page url to open, if a click asked for one
fn run(terminal: &mut DefaultTerminal, args: &Args) -> Result<Option<String>> {
    let size = terminal.size()?;
    let mut app = build_app(args, size.width as usize, size.height as usize)?;
    app.rebuild();

    // Main loop
    loop {
        app.tick();

        // Draw
        terminal.draw(|frame| ui::render(frame, &app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) => {
                    // Only handle key press events (not release)
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') => app.quit(),
                            KeyCode::Esc => app.back(),

                            // Pan with hjkl or arrow keys
                            KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
                            KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
                            KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
                            KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

                            // Zoom
                            KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                            KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                            // Rebuild the map from scratch
                            KeyCode::Char('r') => app.rebuild(),

                            _ => {}
                        }
                    }
                }
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    let report = app.lifecycle.destroy_map();
    if !report.is_clean() {
        warn!(failures = report.failures.len(), "teardown on exit was incomplete");
    }
    Ok(app.exit_url.take())
}
