use anyhow::Result;
use tasc_lms::cli::{actions, actions::Action, start};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let action = start()?;

    // Handle the action
    match action {
        Action::Server(_) => actions::server::handle(action).await?,
    }

    Ok(())
}
