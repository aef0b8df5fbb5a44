use crate::client::{NodeClient, OperationReply};

/// One of the checkpoint verbs, sent to a running node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Save,
    Restore,
    Timer { seconds: u32, periodic: bool },
    Stop,
    Done,
    Erase,
}

pub fn run(client: &NodeClient, verb: Verb) -> anyhow::Result<()> {
    let reply = send(client, verb)?;
    println!("checkpoint [{}]: {}", reply.strategy, reply.message);
    Ok(())
}

pub fn send(client: &NodeClient, verb: Verb) -> anyhow::Result<OperationReply> {
    match verb {
        Verb::Save => client.save(),
        Verb::Restore => client.restore(),
        Verb::Timer { seconds, periodic } => client.timer(seconds, periodic),
        Verb::Stop => client.stop(),
        Verb::Done => client.done(),
        Verb::Erase => client.erase(),
    }
}

/// `periodic` is given as `0` or `1`.
pub fn parse_periodic(s: &str) -> Result<bool, String> {
    match s {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(format!("expected 0 or 1, got {:?}", other)),
    }
}
