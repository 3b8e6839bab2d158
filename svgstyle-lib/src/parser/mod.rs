pub mod svg_xml;
