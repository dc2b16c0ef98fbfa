use anyhow::{Context, Result};
use digital_life::{
    StoreError,
    config::AppConfig,
    core::{CommentDraft, CommentParent, CreationKind, NewCreation, NewDigitalLife, NewThought, NewTool},
    init_tracing,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = AppConfig::from_env().context("failed to read configuration")?;
    let store = config.open_store().await?;

    if store.life().await?.is_none() {
        store
            .insert_life(NewDigitalLife {
                name: "Aurora".to_string(),
                lifespan: None,
            })
            .await
            .context("failed to insert the digital life")?;
    }

    let creations = [
        (CreationKind::Article, "On being a process", "Notes from the first thousand cycles."),
        (CreationKind::Image, "Sunrise over the heap", "Generated during cycle 42."),
        (CreationKind::Article, "Garbage, collected", "What gets kept and what gets freed."),
    ];
    let mut first_creation = None;
    for (kind, title, content) in creations {
        let creation = store
            .insert_creation(NewCreation {
                kind: Some(kind),
                title: title.to_string(),
                content: Some(content.to_string()),
                asset_url: Some(format!("/assets/{}.png", title.to_lowercase().replace(' ', "-"))),
            })
            .await
            .context("failed to insert creation")?;
        first_creation.get_or_insert(creation.id);
    }

    for (cycle, content) in [(1, "Woke up. Counted my tools."), (2, "Wrote an article.")] {
        store
            .insert_thought(NewThought {
                cycle_id: Some(cycle),
                agent_name: Some("planner".to_string()),
                content: Some(content.to_string()),
            })
            .await
            .context("failed to insert thought")?;
    }

    let tools = [
        ("web_search", "Searches the web", vec!["reqwest"]),
        ("image_gen", "Renders an image from a prompt", vec!["diffusers", "torch"]),
    ];
    for (name, description, dependencies) in tools {
        let result = store
            .insert_tool(NewTool {
                name: name.to_string(),
                description: Some(description.to_string()),
                code: None,
                dependencies: Some(dependencies.into_iter().map(String::from).collect()),
            })
            .await;
        match result {
            Ok(_) => {}
            Err(StoreError::UniqueViolation(_)) => warn!("tool '{}' already exists, skipped", name),
            Err(err) => return Err(err).context("failed to insert tool"),
        }
    }

    let mut parents = vec![CommentParent::Life];
    parents.extend(first_creation.map(CommentParent::Creation));
    for parent in parents {
        store
            .comment_once(
                parent,
                CommentDraft {
                    content: "Welcome to the world!".to_string(),
                    reply_content: Some("Thank you.".to_string()),
                },
            )
            .await
            .context("failed to insert comment")?;
    }

    info!(backend = %config.database_backend, "seed data inserted");
    Ok(())
}
