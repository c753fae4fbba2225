use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log::info;
use skillplanner_lib::skill_plans::simulation;
use skillplanner_lib::{
    utils, Attribute, AttributeOptimizer, Character, CharacterData, PlanId, PlannerConfig,
    SkillCatalog,
};
use strum::IntoEnumIterator;

/// Plans skill training for a character and estimates how long it takes.
#[derive(Parser)]
#[command(version, about, name = "skillplanner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a skill and its prerequisites into a training queue
    Plan(PlanArgs),
    /// Suggest an attribute remap for the resolved queue
    Suggest {
        #[command(flatten)]
        plan: PlanArgs,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Remap points to distribute, overrides the configured budget
        #[arg(long)]
        budget: Option<i64>,
    },
}

#[derive(Args)]
struct PlanArgs {
    /// Skill catalog, one JSON object per line
    #[arg(long)]
    catalog: PathBuf,
    /// Character snapshot (JSON)
    #[arg(long)]
    character: PathBuf,
    /// Skill id to train
    #[arg(long)]
    skill: String,
    /// Target level (1-5)
    #[arg(long, default_value_t = 5)]
    level: i64,
}

fn load_character(catalog: &SkillCatalog, path: &Path) -> Result<Character> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read character file {}", path.display()))?;
    let data: CharacterData = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse character file {}", path.display()))?;
    Character::from_data(catalog, data).context("Failed to apply character skills")
}

fn build_plan(args: &PlanArgs) -> Result<(Character, PlanId)> {
    let catalog = SkillCatalog::from_file(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;
    let mut character = load_character(&catalog, &args.character)?;
    let skill = catalog.lookup(&args.skill)?;

    let plan = character.create_plan(&format!("{} {}", skill.name, args.level))?;
    let added = character
        .plans_mut()
        .add_skill(&catalog, plan, &skill, args.level)
        .with_context(|| format!("Failed to plan {} to level {}", skill.id, args.level))?;
    if !added {
        info!("{} {} is already trained", skill.name, args.level);
    }
    Ok((character, plan))
}

fn print_plan(character: &Character, plan: PlanId) -> Result<()> {
    let view = character.plans().plan(plan)?;
    let schedule = simulation::schedule(&character.effective_attributes(), &view)?;

    println!("{} for {}", view.name(), character.name());
    println!("{:<30} {:<5} {:>10} {:>10} {:>15}", "Skill", "Lvl", "SP", "SP/min", "Time");
    println!("{}", "-".repeat(74));
    for (entry, segment) in view.entries().zip(&schedule.segments) {
        println!(
            "{:<30} {:<5} {:>10} {:>10.1} {:>15}",
            entry.skill().name,
            segment.level,
            segment.sp_to_train,
            segment.sp_per_minute,
            utils::format_training_time(segment.duration_minutes)
        );
    }
    println!(
        "\nTotal: {} SP in {}, done {}",
        schedule.total_sp,
        utils::format_training_time(schedule.total_minutes),
        schedule.completion_time(Utc::now()).format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Commands::Plan(args) => {
            let (character, plan) = build_plan(&args)?;
            print_plan(&character, plan)
        }
        Commands::Suggest {
            plan: args,
            config,
            budget,
        } => {
            let config =
                PlannerConfig::load(config.as_deref()).context("Failed to load configuration")?;
            let (character, plan) = build_plan(&args)?;
            let view = character.plans().plan(plan)?;
            let budget = budget.unwrap_or(config.optimizer.remap_points);

            let result = AttributeOptimizer::new(config.optimizer.clone())
                .suggest_attributes(&view, budget, character.implants())
                .context("Failed to optimize attributes")?;
            let current =
                simulation::minutes_to_train_all(&character.effective_attributes(), &view)?;
            let remapped = Character::with_allocation(
                config.optimizer.base_attribute,
                &result.allocation_attributes(),
                character.implants(),
            );

            let allocation = Attribute::iter()
                .map(|attr| {
                    let points = result.allocation.get(&attr).copied().unwrap_or(0);
                    format!("{} {}", attr, points)
                })
                .collect::<Vec<_>>()
                .join(", ");
            println!("Suggested remap for {}: {}", view.name(), allocation);
            println!(
                "Training time: {} with current attributes, {} after remap ({} iterations)",
                utils::format_training_time(current),
                utils::format_training_time(result.minutes),
                result.iterations
            );
            let schedule = simulation::schedule(&remapped.effective_attributes(), &view)?;
            println!(
                "Done {} if remapped now",
                schedule.completion_time(Utc::now()).format("%Y-%m-%d %H:%M UTC")
            );
            Ok(())
        }
    }
}
