use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("rolodex")
        .version("1.0.0")
        .author("Rolodex Contributors")
        .about("Scrape business cards from listing pages into CSV or JSON")
        .arg(clap::arg!(<URL> ... "Listing page URL(s), scraped in order"))
        .arg(clap::arg!(--card_selector <CSS> "CSS selector for one business card").default_value("div.business-card"))
        .arg(clap::arg!(--name_selector <CSS> "CSS selector for the name, inside a card").default_value("h2"))
        .arg(clap::arg!(--email_selector <CSS> "CSS selector for the email, inside a card").default_value("span.email"))
        .arg(
            clap::arg!(--field <SPEC> "Extra field, e.g. phone=a.tel or website=a.site@href (repeatable)")
                .value_name("NAME=CSS[@ATTR]")
                .action(clap::ArgAction::Append),
        )
        .arg(
            clap::arg!(-f --format <FORMAT> "Output format (csv, json)")
                .value_name("FORMAT")
                .default_value("csv")
                .value_parser(["csv", "json"]),
        )
        .arg(
            clap::arg!(-o --output <PATH> "Output file, or \"-\" for stdout; the extension follows --format")
                .value_name("PATH")
                .default_value("marketing_list.csv")
                .value_hint(clap::ValueHint::FilePath),
        )
        .arg(clap::arg!(--timeout <SECS> "Per-attempt HTTP timeout in seconds").default_value("15"))
        .arg(clap::arg!(--retries <N> "Retries after the first attempt").default_value("3"))
        .arg(
            clap::arg!(--backoff <SECS> "Base backoff in seconds, doubled after every failed attempt")
                .default_value("0.7"),
        )
        .arg(clap::arg!(--max_backoff <SECS> "Upper bound on a single backoff sleep, in seconds").default_value("30"))
        .arg(clap::arg!(--deadline <SECS> "Overall time budget per page across all attempts, in seconds"))
        .arg(clap::arg!(--user_agent <UA> "Custom User-Agent for HTTP requests").value_name("UA"))
        .arg(
            clap::arg!(--min_filled <N> "Non-empty fields a card needs to be kept (0 keeps every card)")
                .default_value("1"),
        )
        .arg(clap::arg!(--missing_value <TEXT> "Placeholder written for fields that matched nothing").default_value(""))
        .arg(clap::arg!(-v --verbose "Enable debug logging and per-page details"))
        .arg(clap::arg!(-q --quiet "Only print errors"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "rolodex", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "rolodex", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "rolodex", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "rolodex", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
