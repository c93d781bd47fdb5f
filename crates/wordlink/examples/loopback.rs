//! Two channels joined by an in-memory link.
//!
//! Pushes more words than the credit window holds through one direction,
//! then sends a message back the other way.
//!
//! Run with:
//!   cargo run --example loopback
//!
//! Set `WORDLINK_LOG=json` for JSON log lines.

use std::thread;

use wordlink::channel::{ChannelConfig, Message, MessageChannel, PeerInfo, WordChannel};
use wordlink::transport::{MacAddr, MemoryLink};

const HOST: MacAddr = MacAddr::new([0x02, 0x00, 0x5e, 0x10, 0x00, 0x01]);
const BOARD: MacAddr = MacAddr::new([0x02, 0x00, 0x5e, 0x10, 0x00, 0x02]);

fn init_logging() {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false);

    if std::env::var("WORDLINK_LOG").is_ok_and(|v| v == "json") {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = ChannelConfig::default().with_window(16);
    let (host_link, board_link) = MemoryLink::pair(HOST, BOARD);

    let host = WordChannel::open(
        host_link,
        PeerInfo {
            local: HOST,
            peer: BOARD,
        },
        &config,
    )?;
    let board = WordChannel::open(
        board_link,
        PeerInfo {
            local: BOARD,
            peer: HOST,
        },
        &config,
    )?;

    let count = 10 * config.window as u64;
    let writer = thread::spawn(move || -> wordlink::channel::Result<WordChannel<MemoryLink>> {
        for w in 0..count {
            host.write_blocking(w * w)?;
        }
        Ok(host)
    });

    for w in 0..count {
        let got = board.read_blocking()?;
        if got != w * w {
            return Err(format!("word {w}: expected {}, got {got}", w * w).into());
        }
    }
    let host = writer.join().map_err(|_| "writer thread panicked")??;
    eprintln!("{count} words through a window of {}", config.window);

    let mut host = MessageChannel::new(host, &config);
    let board = MessageChannel::new(board, &config);
    board.write(Message::new(1, 2, 3, vec![0xCAFE, 0xF00D, 0xBEEF])?)?;
    let message = host.read_blocking()?;
    eprintln!(
        "message on channel {} with body {:x?}",
        message.channel_id,
        message.body()
    );

    eprintln!("stats: {}", serde_json::to_string(&host.stats())?);
    Ok(())
}
