//! Four-character box type codes
//!
//! Reference: ISO/IEC 14496-12:2022 and the QuickTime/iTunes metadata item list.

use std::fmt;

/// Box type enum for the boxes this crate inspects or synthesizes
macro_rules! boxtype {
    ($( $name:ident => $value:expr ),*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum BoxType {
            $( $name, )*
            UnknownBox(u32),
        }

        impl From<u32> for BoxType {
            fn from(t: u32) -> BoxType {
                match t {
                    $( $value => BoxType::$name, )*
                    _ => BoxType::UnknownBox(t),
                }
            }
        }

        impl From<BoxType> for u32 {
            fn from(t: BoxType) -> u32 {
                match t {
                    $( BoxType::$name => $value, )*
                    BoxType::UnknownBox(t) => t,
                }
            }
        }
    }
}

boxtype! {
    FtypBox => 0x66747970,
    MoovBox => 0x6d6f6f76,
    MoofBox => 0x6d6f6f66,
    MfraBox => 0x6d667261,
    MdatBox => 0x6d646174,
    FreeBox => 0x66726565,
    SkipBox => 0x736b6970,
    WideBox => 0x77696465,
    SidxBox => 0x73696478,
    UuidBox => 0x75756964,
    MvhdBox => 0x6d766864,
    MvexBox => 0x6d766578,
    TrakBox => 0x7472616b,
    EdtsBox => 0x65647473,
    MdiaBox => 0x6d646961,
    MinfBox => 0x6d696e66,
    DinfBox => 0x64696e66,
    StblBox => 0x7374626c,
    StcoBox => 0x7374636f,
    Co64Box => 0x636f3634,
    UdtaBox => 0x75647461,
    MetaBox => 0x6d657461,
    HdlrBox => 0x68646c72,
    IlstBox => 0x696c7374,
    DataBox => 0x64617461,
    MeanBox => 0x6d65616e,
    NameBox => 0x6e616d65,
    CNamBox => 0xa96e616d,
    CArtBox => 0xa9415254,
    CAlbBox => 0xa9616c62,
    CDayBox => 0xa9646179,
    CovrBox => 0x636f7672
}

impl BoxType {
    /// Build a box type from its four raw bytes
    pub fn from_fourcc(fourcc: [u8; 4]) -> Self {
        BoxType::from(u32::from_be_bytes(fourcc))
    }

    /// The four raw bytes of this type as they appear on disk
    pub fn fourcc(self) -> [u8; 4] {
        u32::from(self).to_be_bytes()
    }

    /// Boxes whose payload is a plain sequence of child boxes
    ///
    /// `meta` is listed here too; its optional version/flags prefix is
    /// handled by the tree parser.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            BoxType::MoovBox
                | BoxType::TrakBox
                | BoxType::EdtsBox
                | BoxType::MdiaBox
                | BoxType::MinfBox
                | BoxType::DinfBox
                | BoxType::StblBox
                | BoxType::MvexBox
                | BoxType::UdtaBox
                | BoxType::MetaBox
                | BoxType::IlstBox
        )
    }
}

impl fmt::Display for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Latin-1 so that the iTunes copyright-sign prefix renders as '©'
        for b in self.fourcc() {
            let c = if b.is_ascii_graphic() || b == b' ' || b >= 0xa0 {
                b as char
            } else {
                '.'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
