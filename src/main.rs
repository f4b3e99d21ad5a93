mod cli;

use clap::Parser;
use itertools::Itertools;

use rulebook::RuleSet;

fn main() {
    let args = cli::Cli::parse();

    let text = match std::fs::read_to_string(&args.file) {
        Ok(text) => text,
        Err(error) => {
            eprintln!("{}: {}", args.file.display(), error);
            std::process::exit(1);
        }
    };

    let mut rules = RuleSet::new();
    if let Err(error) = rules.load(&text) {
        eprintln!("{}: {}", args.file.display(), error);
        std::process::exit(1);
    }

    match args.rule {
        Some(name) => match rules.find_rule(&name) {
            Some(rule) => {
                if let Some(prediction) = &rule.prediction {
                    let pin = if rule.prediction_pin { " (pinned)" } else { "" };
                    println!("{} predicts with \"{}\"{}", rule.name, prediction.value, pin);
                }
                let next = rule.next_tokens.iter().map(|matcher| matcher.to_string()).join(" ");
                println!("{} starts with: {}", rule.name, next);
            }
            None => {
                eprintln!("No rule named `{}`", name);
                std::process::exit(1);
            }
        },
        None => {
            println!(
                "{} rules, {} keywords, {} symbols",
                rules.rules().len(),
                rules.key_set().len(),
                rules.symbol_set().len()
            );
        }
    }
}
