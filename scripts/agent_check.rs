// Quick diagnostic: check the agent gateway the bot is configured against
// Run: cargo run --bin agent_check

use ragbot::agent::{AgentClient, HttpAgentClient};
use ragbot::config::Config;
use ragbot::format;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("FAIL: {}", e);
            std::process::exit(1);
        }
    };

    let client = match HttpAgentClient::new(
        config.agent_api_url.clone(),
        config.agent_api_token.clone(),
        config.agent.clone(),
        config.agent_timeout,
    ) {
        Ok(client) => client,
        Err(e) => {
            println!("FAIL: building HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    println!("Gateway: {}", config.agent_api_url);
    println!("Region:  {}\n", config.agent.region);

    // 1. Agent
    println!("1. Getting agent status...");
    match client.get_agent_status().await {
        Ok(agent) => println!("   OK.\n{}", indent(&format::agent_status(&agent))),
        Err(e) => println!("   FAIL: {}", e),
    }

    // 2. Knowledge base (optional)
    println!("\n2. Getting knowledge base status...");
    if client.knowledge_base_configured() {
        match client.get_knowledge_base_status().await {
            Ok(kb) => println!("   OK.\n{}", indent(&format::knowledge_base_status(&kb))),
            Err(e) => println!("   FAIL: {}", e),
        }
    } else {
        println!("   SKIP: AWS_BEDROCK_KNOWLEDGE_BASE_ID not set");
    }

    // 3. Latest ingestion job (needs data source id)
    println!("\n3. Getting latest ingestion job...");
    match client.latest_ingestion().await {
        Ok(job) => println!("   OK.\n{}", indent(&format::latest_ingestion(job.as_ref()))),
        Err(e) => println!("   FAIL: {}", e),
    }

    // 4. Overall health, as /ragbot-health-check reports it
    println!("\n4. Running health check...");
    match client.check_health().await {
        Ok(report) => {
            println!("{}", indent(&format::health(&report)));
            if !report.healthy {
                std::process::exit(2);
            }
        }
        Err(e) => {
            println!("   FAIL: {}", e);
            std::process::exit(2);
        }
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("   {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
