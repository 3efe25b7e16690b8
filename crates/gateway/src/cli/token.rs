//! `insider token`: mint a caller token with the configured secret.

use ei_domain::config::Config;

use crate::auth::CallerResolver;

pub fn mint(config: &Config, user_id: &str, email: Option<&str>) -> anyhow::Result<()> {
    let resolver = CallerResolver::new(
        std::env::var(&config.auth.secret_env).ok(),
        config.auth.clone(),
    );
    let token = resolver
        .sign(user_id, email)
        .map_err(|e| anyhow::anyhow!("{e} (set {} and retry)", config.auth.secret_env))?;

    if config.auth.is_privileged(user_id, email) {
        eprintln!("note: {user_id} is a privileged user and will receive debug records");
    }
    println!("{token}");
    Ok(())
}
