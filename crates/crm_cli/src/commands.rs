use clap::{Subcommand, ValueEnum};
use crm_core::DailyLogKind;

#[derive(Subcommand)]
pub(crate) enum LogsCommand {
    /// List stored daily logs, newest first.
    List {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        #[arg(long, default_value_t = 25)]
        limit: u32,
    },
    /// Fetch one log with its entries.
    Show { id: String },
    /// Close an open log.
    Close { id: String },
    /// Re-read every log of a kind through the reconciler.
    Refresh {
        #[arg(long, value_enum)]
        kind: KindArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum KindArg {
    Client,
    Order,
}

impl From<KindArg> for DailyLogKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Client => DailyLogKind::Client,
            KindArg::Order => DailyLogKind::Order,
        }
    }
}
