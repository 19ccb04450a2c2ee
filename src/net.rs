//! Packet IO over TCP socket halves.

use crate::protocol::{
    packet,
    packet::ProtocolState,
    vanilla_codec::{CompressionThreshold, EncryptionKey, VanillaCodec},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex,
};

/// Packet IO over a vanilla TCP connection.
pub struct VanillaPacketIo<Side: packet::Side, State: ProtocolState> {
    send_stream: Mutex<OwnedWriteHalf>,
    recv_stream: Mutex<OwnedReadHalf>,
    send_codec: Mutex<VanillaCodec<Side, State>>,
    recv_codec: Mutex<VanillaCodec<Side, State>>,
}

impl<Side, State> VanillaPacketIo<Side, State>
where
    Side: packet::Side,
    State: ProtocolState,
{
    pub fn new(stream: TcpStream) -> Self {
        let (recv_stream, send_stream) = stream.into_split();
        Self {
            send_stream: Mutex::new(send_stream),
            recv_stream: Mutex::new(recv_stream),
            send_codec: Mutex::new(VanillaCodec::new()),
            recv_codec: Mutex::new(VanillaCodec::new()),
        }
    }

    pub fn enable_compression(&mut self, threshold: CompressionThreshold) {
        self.send_codec.get_mut().enable_compression(threshold);
        self.recv_codec.get_mut().enable_compression(threshold);
    }

    pub fn enable_encryption(&mut self, key: EncryptionKey) {
        self.send_codec.get_mut().enable_encryption(key);
        self.recv_codec.get_mut().enable_encryption(key);
    }

    pub fn switch_state<NewState: ProtocolState>(self) -> VanillaPacketIo<Side, NewState> {
        VanillaPacketIo {
            send_stream: self.send_stream,
            recv_stream: self.recv_stream,
            send_codec: Mutex::new(self.send_codec.into_inner().switch_state()),
            recv_codec: Mutex::new(self.recv_codec.into_inner().switch_state()),
        }
    }

    pub async fn send_packet(&self, packet: Side::SendPacket<State>) -> anyhow::Result<()> {
        self.send_packet_raw(packet).await.map(|_| ())
    }

    /// Sends a packet, returning its plain body for the dump sink.
    pub async fn send_packet_raw(
        &self,
        packet: Side::SendPacket<State>,
    ) -> anyhow::Result<Vec<u8>> {
        let (bytes, plain) = {
            let mut codec = self.send_codec.lock().await;
            codec.encode_packet_raw(&packet)?
        };
        let mut stream = self.send_stream.lock().await;
        stream.write_all(&bytes).await?;
        Ok(plain)
    }

    pub async fn recv_packet(&self) -> anyhow::Result<Side::RecvPacket<State>> {
        self.recv_packet_raw().await.map(|(packet, _)| packet)
    }

    /// Receives a packet along with its plain body.
    ///
    /// Cancellation-safe: both locks are taken before any await on the
    /// socket, so a cancelled call never drops a decoded packet.
    pub async fn recv_packet_raw(
        &self,
    ) -> anyhow::Result<(Side::RecvPacket<State>, Vec<u8>)> {
        let mut buffer = [0u8; 4096];
        loop {
            let mut codec = self.recv_codec.lock().await;
            let mut stream = self.recv_stream.lock().await;

            if let Some(result) = codec.decode_packet_raw()? {
                return Ok(result);
            }

            let bytes_read = stream.read(&mut buffer).await?;
            if bytes_read == 0 {
                anyhow::bail!("end of stream");
            }
            codec.give_data(&mut buffer[..bytes_read]);
        }
    }
}
