use clap::{Parser, Subcommand, command};

#[derive(Parser)]
#[command()]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the contacts REST API
    Serve {
        /// Address to listen on, overrides BIND_ADDRESS
        #[arg(long)]
        bind: Option<String>,
    },
    /// Create the contacts table if it does not exist
    InitDb,
    /// Insert randomly generated contacts
    Seed {
        /// The number of contacts to generate
        count: u32,
    },
}
