//! Row channel between the extractor and the loader.
//!
//! One producer, one consumer, FIFO. The channel closes when the sender is
//! dropped; the receiver then drains what is buffered and reports the end of
//! the stream. An extraction failure travels as a final `Err` message so the
//! loader can tell it apart from a clean close.

use tokio::sync::mpsc;

use crate::core::record::Record;
use crate::error::{EtlError, Result};

/// One message on the row channel.
pub type RowMessage = Result<Record>;

/// Create a row channel. `None` capacity means unbounded.
pub fn row_channel(capacity: Option<usize>) -> (RowSender, RowReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (RowSender::Bounded(tx), RowReceiver::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (RowSender::Unbounded(tx), RowReceiver::Unbounded(rx))
        }
    }
}

/// Producer half. Dropping it closes the channel.
#[derive(Debug)]
pub enum RowSender {
    Bounded(mpsc::Sender<RowMessage>),
    Unbounded(mpsc::UnboundedSender<RowMessage>),
}

impl RowSender {
    /// Enqueue a message, waiting for space on a bounded channel.
    ///
    /// Fails once the receiver is gone.
    pub async fn send(&self, message: RowMessage) -> Result<()> {
        let sent = match self {
            RowSender::Bounded(tx) => tx.send(message).await.is_ok(),
            RowSender::Unbounded(tx) => tx.send(message).is_ok(),
        };
        if sent {
            Ok(())
        } else {
            Err(EtlError::ChannelClosed("loader is no longer receiving".into()))
        }
    }

    /// Send a failure as the last message.
    ///
    /// Hands the error back when the receiver is gone.
    pub async fn fail(self, err: EtlError) -> std::result::Result<(), EtlError> {
        let returned = match &self {
            RowSender::Bounded(tx) => tx.send(Err(err)).await.err().map(|e| e.0),
            RowSender::Unbounded(tx) => tx.send(Err(err)).err().map(|e| e.0),
        };
        match returned {
            Some(Err(err)) => Err(err),
            _ => Ok(()),
        }
    }
}

/// Consumer half.
#[derive(Debug)]
pub enum RowReceiver {
    Bounded(mpsc::Receiver<RowMessage>),
    Unbounded(mpsc::UnboundedReceiver<RowMessage>),
}

impl RowReceiver {
    /// Next message, or `None` once the sender is dropped and the buffer is empty.
    pub async fn recv(&mut self) -> Option<RowMessage> {
        match self {
            RowReceiver::Bounded(rx) => rx.recv().await,
            RowReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;
    use std::sync::Arc;
    use std::time::Duration;

    fn record(id: i32) -> Record {
        Record::new(Arc::from(vec!["ID".to_string()]), vec![SqlValue::I32(id)])
    }

    async fn drain(rx: &mut RowReceiver) -> Vec<i32> {
        let mut ids = Vec::new();
        while let Some(message) = rx.recv().await {
            match message.unwrap().get("ID") {
                Some(SqlValue::I32(id)) => ids.push(*id),
                other => panic!("unexpected value {:?}", other),
            }
        }
        ids
    }

    #[tokio::test]
    async fn test_unbounded_is_fifo_and_drains_after_close() {
        let (tx, mut rx) = row_channel(None);
        for id in 0..1000 {
            tx.send(Ok(record(id))).await.unwrap();
        }
        drop(tx);

        let ids = drain(&mut rx).await;
        assert_eq!(ids, (0..1000).collect::<Vec<_>>());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_bounded_applies_backpressure() {
        let (tx, mut rx) = row_channel(Some(2));
        tx.send(Ok(record(1))).await.unwrap();
        tx.send(Ok(record(2))).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(Ok(record(3)))).await;
        assert!(blocked.is_err(), "third send should wait for space");

        let producer = tokio::spawn(async move {
            for id in 3..=10 {
                tx.send(Ok(record(id))).await.unwrap();
            }
        });
        let ids = drain(&mut rx).await;
        producer.await.unwrap();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_error_message_is_delivered_in_order() {
        let (tx, mut rx) = row_channel(Some(8));
        tx.send(Ok(record(1))).await.unwrap();
        tx.fail(EtlError::extract("job", EtlError::Source("boom".into())))
            .await
            .unwrap();

        assert!(rx.recv().await.unwrap().is_ok());
        assert!(matches!(rx.recv().await, Some(Err(EtlError::Extract { .. }))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_fails() {
        let (tx, rx) = row_channel(None);
        drop(rx);
        let err = tx.send(Ok(record(1))).await.unwrap_err();
        assert!(matches!(err, EtlError::ChannelClosed(_)));
    }

    #[tokio::test]
    async fn test_failure_comes_back_when_receiver_dropped() {
        let (tx, rx) = row_channel(Some(1));
        drop(rx);
        let err = tx.fail(EtlError::Source("lost".into())).await.unwrap_err();
        assert!(matches!(err, EtlError::Source(ref m) if m == "lost"));
    }
}
