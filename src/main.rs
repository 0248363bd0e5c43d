use std::time::Duration;

use regression_playground::config::Config;
use regression_playground::config::CONFIG_PATH;
use regression_playground::engine::RegressionEngine;
use regression_playground::error::AppError;
use regression_playground::schema::DisplayPoint;
use regression_playground::session::Session;
use regression_playground::session::Surface;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    env_logger::init();
    let config = Config::load_or_default(CONFIG_PATH)?;
    let session = Session::spawn(
        RegressionEngine::new(config.engine.settings()),
        Surface::from_config(&config),
    );

    // Drag a stroke from the lower left towards the upper right of the plot.
    let (w, h, pad) = (
        config.surface.width,
        config.surface.height,
        config.surface.padding,
    );
    for i in 0..=24 {
        let t = 0.05 + 0.9 * i as f64 / 24.0;
        let position = DisplayPoint::new(
            pad + t * (w - 2.0 * pad),
            h - pad - t * 0.6 * (h - 2.0 * pad),
        );
        if i == 0 {
            session.add_point(position)?;
        } else {
            session.draw_move(position)?;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    let mut state = session.subscribe();
    if state.borrow_and_update().engine().points().is_empty() {
        println!("No points were recorded");
        session.shutdown().await;
        return Ok(());
    }

    session.play()?;
    let mut playing = true;
    while playing && state.changed().await.is_ok() {
        playing = state.borrow().engine().fit_state().is_playing;
    }

    let result = session.state();
    let snapshot = result.engine();
    println!(
        "{} points, {} after {} steps",
        snapshot.points().len(),
        snapshot.weights(),
        snapshot.fit_state().current_step
    );
    if let Some(loss) = snapshot.loss_history().last() {
        println!("Final MSE: {:.6}", loss);
    }
    if let Some(optimum) = snapshot.least_squares() {
        println!(
            "Least squares: {} (R^2 = {:.4})",
            optimum.weights, optimum.r2
        );
    }
    if let Some(line) = snapshot.prediction_line() {
        let [start, end] = line.endpoints().map(|p| result.mapper().to_display(&p));
        println!("Prediction line on screen: {} -> {}", start, end);
    }

    session.shutdown().await;
    Ok(())
}
