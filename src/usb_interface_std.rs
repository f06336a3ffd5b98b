//! Host side of the serial link: CSV data log on stdout, status in the log.

use log::{debug, info, warn};

use crate::status::{DATA_LOG_CHANNEL, STATUS_WATCH};

#[embassy_executor::task]
pub async fn data_log_task() {
    info!("Starting data log task");
    let receiver = DATA_LOG_CHANNEL.receiver();
    loop {
        match receiver.receive().await.to_csv() {
            Ok(csv) => println!("{}", csv),
            Err(_) => debug!("Data log line too long, dropping it"),
        }
    }
}

#[embassy_executor::task]
pub async fn status_task() {
    let Some(mut receiver) = STATUS_WATCH.receiver() else {
        warn!("No status receiver left");
        return;
    };

    let mut last_state = "";
    loop {
        let snapshot = receiver.changed().await;
        let json = match snapshot.to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!("Status encoding failed: {:?}", err);
                continue;
            }
        };
        if snapshot.state != last_state {
            info!("{}", json);
            last_state = snapshot.state;
        } else {
            debug!("{}", json);
        }
    }
}
