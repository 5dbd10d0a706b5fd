use finance_crew::config::RuntimeConfig;
use finance_crew::driver::Driver;
use finance_crew::error::CrewError;
use finance_crew::models::RunRecord;
use finance_crew::training::mean_score;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Financial report crew starting");

    let config = RuntimeConfig::from_env()?;
    let driver = Driver::new(config);

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "run".to_string());

    match command.as_str() {
        "run" => {
            let record = driver.run().await?;
            print_run(&record);
        }
        "train" => {
            let n_iterations = parse_iterations(args.next())?;
            let filename = args.next().ok_or_else(|| {
                CrewError::ConfigError("train requires <n_iterations> <filename>".to_string())
            })?;
            driver.train(n_iterations, &filename).await?;
            println!("Training complete: {} iteration(s) recorded in {}", n_iterations, filename);
        }
        "replay" => {
            let task_id = args.next().ok_or_else(|| {
                CrewError::ConfigError("replay requires <task_id>".to_string())
            })?;
            let record = driver.replay(&task_id).await?;
            print_run(&record);
        }
        "test" => {
            let n_iterations = parse_iterations(args.next())?;
            let eval_judge = args.next().ok_or_else(|| {
                CrewError::ConfigError("test requires <n_iterations> <eval_judge>".to_string())
            })?;
            let scores = driver.test(n_iterations, &eval_judge).await?;

            println!("\n=== EVALUATION RESULTS (judge: {}) ===", eval_judge);
            for score in &scores {
                println!("  {}", score);
            }
            println!("Mean score: {:.2}/10", mean_score(&scores));
        }
        "run_with_trigger" => {
            let payload = args.next().ok_or_else(|| {
                CrewError::TriggerPayloadError(
                    "No trigger payload provided. Please provide JSON payload as argument."
                        .to_string(),
                )
            })?;
            let record = driver.run_with_trigger(&payload).await?;
            print_run(&record);
        }
        other => {
            return Err(Box::new(CrewError::ConfigError(format!(
                "unknown command '{}' (expected run, train, replay, test, or run_with_trigger)",
                other
            ))) as Box<dyn std::error::Error>);
        }
    }

    Ok(())
}

fn parse_iterations(arg: Option<String>) -> Result<u32, CrewError> {
    let raw = arg.ok_or_else(|| {
        CrewError::ConfigError("missing <n_iterations> argument".to_string())
    })?;
    raw.parse().map_err(|_| {
        CrewError::ConfigError(format!("<n_iterations> must be a number, got '{}'", raw))
    })
}

fn print_run(record: &RunRecord) {
    println!("\n=== CREW RESULT ===");
    println!("Run ID: {}", record.run_id);
    for task in &record.tasks {
        println!("  {} ({}): {} ms", task.task_id, task.agent, task.execution_time_ms);
    }
    println!("\n{}", record.final_output);
}
