//! `ctxweave config`: configuration management commands.

use ctxweave_config::PipelineConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match PipelineConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.token_truncation.enabled && config.history.max_tokens.is_none() {
                warnings.push("No token limit is enforced (token_truncation and history.max_tokens are off)");
            }

            if config
                .token_truncation
                .max_tokens
                .is_some_and(|limit| limit > config.max_tokens)
            {
                warnings.push("token_truncation.max_tokens exceeds the overall max_tokens");
            }

            if config.history.keep_latest_n == Some(0) {
                warnings.push("history.keep_latest_n = 0 keeps only system messages");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Model:       {}", config.model);
            println!("   Max tokens:  {}", config.max_tokens);
            println!("   Budget:      {}", config.token_truncation_limit());
            println!(
                "   Buffer:      {:.0}%",
                config.token_truncation.buffer_percentage * 100.0
            );
            println!(
                "   Keep latest: {}",
                config
                    .history
                    .keep_latest_n
                    .map_or("all".to_string(), |n| n.to_string())
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = PipelineConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = PipelineConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.");
    } else {
        std::fs::write(&config_path, PipelineConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    Ok(())
}
