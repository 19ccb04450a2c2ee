//! Framed packet codec: varint length prefix, zlib compression above a
//! threshold, AES/CFB8 stream encryption once login keys the socket.

use super::BUFFER_LIMIT;
use crate::protocol::{
    packet, packet::ProtocolState, var_int_size, Decode, DecodeError, Decoder, Encode, Encoder,
};
use aes::{cipher::generic_array::GenericArray, Aes128};
use anyhow::bail;
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use flate2::Compression;
use std::{
    borrow::Cow,
    io::{Read, Write},
    marker::PhantomData,
    num::NonZeroUsize,
    slice,
};

/// Serverbound traffic is mostly tiny, so compression time is spent
/// on the rare large packet only.
const COMPRESSION_LEVEL: Compression = Compression::fast();

/// The compression threshold this proxy negotiates on both legs.
pub const COMPRESSION_THRESHOLD: usize = 256;

/// Key used for encryption. The shared secret doubles as the IV.
#[derive(Copy, Clone, Debug)]
pub struct EncryptionKey([u8; 16]);

impl EncryptionKey {
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

/// Threshold in bytes above which a packet body is compressed.
#[derive(Copy, Clone, Debug)]
pub struct CompressionThreshold(NonZeroUsize);

impl CompressionThreshold {
    pub fn new(threshold: NonZeroUsize) -> Self {
        Self(threshold)
    }

    pub fn standard() -> Self {
        Self(NonZeroUsize::new(COMPRESSION_THRESHOLD).unwrap())
    }
}

/// Codec state.
pub struct VanillaCodec<Side, State> {
    /// Buffered incoming bytes, already decrypted.
    read_buffer: Vec<u8>,
    encryption_state: Option<EncryptionState>,
    compression_state: Option<CompressionState>,
    _marker: PhantomData<(Side, State)>,
}

impl<Side, State> VanillaCodec<Side, State>
where
    Side: packet::Side,
    State: ProtocolState,
{
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::new(),
            encryption_state: None,
            compression_state: None,
            _marker: PhantomData,
        }
    }

    pub fn switch_state<NewState: ProtocolState>(self) -> VanillaCodec<Side, NewState> {
        VanillaCodec {
            read_buffer: self.read_buffer,
            encryption_state: self.encryption_state,
            compression_state: self.compression_state,
            _marker: PhantomData,
        }
    }

    pub fn enable_encryption(&mut self, key: EncryptionKey) {
        assert!(
            self.encryption_state.is_none(),
            "called enable_encryption() multiple times"
        );
        self.encryption_state = Some(EncryptionState {
            encryptor: cfb8::Encryptor::new(&key.0.into(), &key.0.into()),
            decryptor: cfb8::Decryptor::new(&key.0.into(), &key.0.into()),
        });
    }

    pub fn enable_compression(&mut self, threshold: CompressionThreshold) {
        assert!(
            self.compression_state.is_none(),
            "called enable_compression() multiple times"
        );
        self.compression_state = Some(CompressionState { threshold });
    }

    /// Encodes a packet to its wire representation.
    pub fn encode_packet(&mut self, packet: &Side::SendPacket<State>) -> anyhow::Result<Vec<u8>> {
        self.encode_packet_raw(packet).map(|(wire, _)| wire)
    }

    /// Encodes a packet, additionally returning the plain body
    /// (packet id + fields, before framing) for the dump sink.
    pub fn encode_packet_raw(
        &mut self,
        packet: &Side::SendPacket<State>,
    ) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
        let mut plain_buf = Vec::new();
        packet.encode(&mut Encoder::new(&mut plain_buf));

        let uncompressed_length = i32::try_from(plain_buf.len())?;
        let mut wire_buf = match &self.compression_state {
            Some(CompressionState { threshold }) => {
                let (data_length, body) = if plain_buf.len() >= threshold.0.get() {
                    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), COMPRESSION_LEVEL);
                    encoder.write_all(&plain_buf).expect("infallible write");
                    (uncompressed_length, encoder.finish()?)
                } else {
                    // below the threshold: data length 0, literal body
                    (0, plain_buf.clone())
                };
                let mut buf = Vec::new();
                let mut encoder = Encoder::new(&mut buf);
                encoder.write_var_int(
                    var_int_size(data_length) as i32 + i32::try_from(body.len())?,
                );
                encoder.write_var_int(data_length);
                encoder.write_slice(&body);
                buf
            }
            None => {
                let mut buf = Vec::new();
                let mut encoder = Encoder::new(&mut buf);
                encoder.write_var_int(uncompressed_length);
                encoder.write_slice(&plain_buf);
                buf
            }
        };

        if let Some(EncryptionState { encryptor, .. }) = &mut self.encryption_state {
            for x in &mut wire_buf {
                let block = slice::from_mut(x);
                encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
        }

        Ok((wire_buf, plain_buf))
    }

    /// Gives data to the internal read buffer.
    ///
    /// `data` is decrypted in-place; its contents after this call are
    /// unspecified. Call `decode_packet` in a loop afterwards.
    pub fn give_data(&mut self, mut data: impl AsMut<[u8]>) {
        let data = data.as_mut();
        if let Some(EncryptionState { decryptor, .. }) = &mut self.encryption_state {
            for byte in data.iter_mut() {
                let block = slice::from_mut(byte);
                decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
            }
        }

        self.read_buffer.extend_from_slice(data);
    }

    /// Attempts to decode a packet.
    ///
    /// * `Ok(None)`: not enough data buffered yet.
    /// * `Ok(Some(packet))`: a packet was read; more may follow.
    /// * `Err(e)`: the stream is invalid.
    pub fn decode_packet(&mut self) -> anyhow::Result<Option<Side::RecvPacket<State>>> {
        self.decode_packet_raw().map(|opt| opt.map(|(packet, _)| packet))
    }

    /// Like `decode_packet`, but also returns the plain body for the
    /// dump sink.
    pub fn decode_packet_raw(
        &mut self,
    ) -> anyhow::Result<Option<(Side::RecvPacket<State>, Vec<u8>)>> {
        let mut decoder = Decoder::new(&self.read_buffer);
        let length = match decoder.read_var_int() {
            Ok(x) => x,
            Err(DecodeError::EndOfStream(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let length = usize::try_from(length)?;
        let total_bytes = length + var_int_size(length as i32);

        if length > BUFFER_LIMIT {
            bail!("packet length of {length} exceeds maximum allowed");
        }
        let packet_contents = match decoder.consume_slice(length) {
            Ok(x) => x,
            Err(DecodeError::EndOfStream(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let plain_data = match &self.compression_state {
            Some(_) => {
                let mut decoder = Decoder::new(packet_contents);
                let uncompressed_length = usize::try_from(decoder.read_var_int()?)?;
                if uncompressed_length == 0 {
                    Cow::Borrowed(decoder.buffer())
                } else {
                    let mut buf = Vec::new();
                    flate2::read::ZlibDecoder::new(decoder.buffer())
                        .take(BUFFER_LIMIT as u64)
                        .read_to_end(&mut buf)?;
                    Cow::Owned(buf)
                }
            }
            None => Cow::Borrowed(packet_contents),
        };

        let packet = Side::RecvPacket::<State>::decode(&mut Decoder::new(&plain_data))?;
        let plain = plain_data.into_owned();
        self.read_buffer.drain(..total_bytes);
        Ok(Some((packet, plain)))
    }
}

struct EncryptionState {
    encryptor: cfb8::Encryptor<Aes128>,
    decryptor: cfb8::Decryptor<Aes128>,
}

struct CompressionState {
    threshold: CompressionThreshold,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::{client, server, side, state};

    fn client_codec() -> VanillaCodec<side::Client, state::Play> {
        VanillaCodec::new()
    }

    fn server_codec() -> VanillaCodec<side::Server, state::Play> {
        VanillaCodec::new()
    }

    fn chat(text: &str) -> client::play::Packet {
        client::play::Packet::ChatMessage(client::play::ChatMessage {
            message: text.to_owned(),
        })
    }

    fn decode_one(
        codec: &mut VanillaCodec<side::Server, state::Play>,
        wire: Vec<u8>,
    ) -> client::play::Packet {
        let mut wire = wire;
        codec.give_data(&mut wire);
        codec.decode_packet().unwrap().expect("one whole packet")
    }

    #[test]
    fn plain_round_trip() {
        let mut sender = client_codec();
        let mut receiver = server_codec();
        let wire = sender.encode_packet(&chat("hello")).unwrap();
        let decoded = decode_one(&mut receiver, wire);
        match decoded {
            client::play::Packet::ChatMessage(m) => assert_eq!(m.message, "hello"),
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn compressed_round_trip_both_sides_of_threshold() {
        for text in [
            "short".to_owned(),
            "x".repeat(COMPRESSION_THRESHOLD),
            "y".repeat(COMPRESSION_THRESHOLD * 8),
        ] {
            let mut sender = client_codec();
            let mut receiver = server_codec();
            sender.enable_compression(CompressionThreshold::standard());
            receiver.enable_compression(CompressionThreshold::standard());

            let wire = sender.encode_packet(&chat(&text)).unwrap();
            match decode_one(&mut receiver, wire) {
                client::play::Packet::ChatMessage(m) => assert_eq!(m.message, text),
                other => panic!("unexpected packet {other:?}"),
            }
        }
    }

    #[test]
    fn below_threshold_body_is_literal() {
        let mut sender = client_codec();
        sender.enable_compression(CompressionThreshold::standard());
        let (wire, plain) = sender.encode_packet_raw(&chat("hi")).unwrap();
        // frame: total length varint, then data length 0, then literal body
        let mut decoder = Decoder::new(&wire);
        let total = decoder.read_var_int().unwrap() as usize;
        assert_eq!(total, decoder.buffer().len());
        assert_eq!(decoder.read_var_int().unwrap(), 0);
        assert_eq!(decoder.buffer(), &plain[..]);
    }

    #[test]
    fn encrypted_round_trip() {
        let key = EncryptionKey::new([7; 16]);
        let mut sender = client_codec();
        let mut receiver = server_codec();
        sender.enable_encryption(key);
        receiver.enable_encryption(key);

        let plain_wire = client_codec().encode_packet(&chat("secret")).unwrap();
        let wire = sender.encode_packet(&chat("secret")).unwrap();
        assert_ne!(plain_wire, wire, "ciphertext differs from plaintext");

        match decode_one(&mut receiver, wire) {
            client::play::Packet::ChatMessage(m) => assert_eq!(m.message, "secret"),
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn split_delivery_reassembles() {
        let mut sender = client_codec();
        let mut receiver = server_codec();
        let wire = sender.encode_packet(&chat("fragmented")).unwrap();

        let (a, b) = wire.split_at(3);
        receiver.give_data(&mut a.to_vec());
        assert!(receiver.decode_packet().unwrap().is_none());
        receiver.give_data(&mut b.to_vec());
        assert!(receiver.decode_packet().unwrap().is_some());
    }

    #[test]
    fn clientbound_keep_alive_round_trip() {
        let mut sender: VanillaCodec<side::Server, state::Play> = VanillaCodec::new();
        let mut receiver: VanillaCodec<side::Client, state::Play> = VanillaCodec::new();
        let wire = sender
            .encode_packet(&server::play::Packet::KeepAlive(server::play::KeepAlive {
                id: 0x0123_4567_89AB_CDEF,
            }))
            .unwrap();
        let mut wire = wire;
        receiver.give_data(&mut wire);
        match receiver.decode_packet().unwrap().unwrap() {
            server::play::Packet::KeepAlive(k) => assert_eq!(k.id, 0x0123_4567_89AB_CDEF),
            other => panic!("unexpected packet {other:?}"),
        }
    }
}
