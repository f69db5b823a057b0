//! # Example: wait_for_file
//!
//! Waits for a marker file to appear in a scratch directory. A background
//! thread creates an unrelated file first, then the marker; only the marker
//! satisfies the wait.
//!
//! ## Run
//! ```bash
//! cargo run --example wait_for_file
//! ```

use std::{fs, thread, time::Duration};

use pollvisor::WaitFile;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join(format!("pollvisor-demo-{}", std::process::id()));
    fs::create_dir_all(&dir)?;

    let writer_dir = dir.clone();
    let writer = thread::spawn(move || -> std::io::Result<()> {
        thread::sleep(Duration::from_millis(200));
        fs::write(writer_dir.join("noise.tmp"), b"noise")?;
        thread::sleep(Duration::from_millis(300));
        fs::write(writer_dir.join("done.flag"), b"done")
    });

    let events = WaitFile::new_file_named_in(&dir, "done.flag")
        .repeat_count(100)
        .every_ms(50)
        .finish_with_a_result()?;

    for ev in &events {
        println!("[{:?}] {}", ev.kind, ev.path.display());
    }

    writer.join().map_err(|_| "writer thread panicked")??;
    fs::remove_dir_all(&dir)?;
    Ok(())
}
