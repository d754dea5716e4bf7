use clap::{CommandFactory, Parser};

use super::*;

fn parse(args: &[&str]) -> Command {
    Cli::try_parse_from(std::iter::once("portal-cli").chain(args.iter().copied())).unwrap().command
}

#[test]
fn command_tree_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn account_commands_stay_top_level() {
    assert!(matches!(parse(&["dashboard"]), Command::Account(AccountCommand::Dashboard)));
    assert!(matches!(parse(&["transactions"]), Command::Account(AccountCommand::Transactions)));
    match parse(&["withdraw", "--amount", "20000", "--phone", "3001234567"]) {
        Command::Account(AccountCommand::Withdraw { amount, phone }) => {
            assert_eq!(amount, "20000");
            assert_eq!(phone, "3001234567");
        }
        other => panic!("unexpected {other:?}"),
    }
    match parse(&["invest", "--project", "p1", "--amount", "5000"]) {
        Command::Account(AccountCommand::Invest { project, amount }) => {
            assert_eq!((project.as_str(), amount.as_str()), ("p1", "5000"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn grouped_commands_parse_into_their_groups() {
    assert!(matches!(
        parse(&["admin", "approve", "42"]),
        Command::Admin(AdminCommand { command: AdminSubcommand::Approve { .. } })
    ));
    assert!(matches!(
        parse(&["projects", "stats", "--active"]),
        Command::Projects(ProjectsCommand { command: ProjectsSubcommand::Stats { project_id: None, active: true } })
    ));
}
